use crate::error::Result;
use crate::models::RiskProfile;
use crate::scan::snapshot;
use crate::utils::get_data_dir;

pub async fn run() -> Result<()> {
    let path = get_data_dir().join("recommendations.json");

    let Some(set) = snapshot::load_recommendations(&path).await? else {
        println!("No recommendation snapshot yet; run `swingscan scan` first.");
        return Ok(());
    };

    match set.last_scan {
        Some(ts) => println!(
            "Last scan: {}{}",
            ts.format("%Y-%m-%d %H:%M:%S UTC"),
            if set.is_scanning { " (scan in progress)" } else { "" },
        ),
        None => println!("No completed scan recorded."),
    }

    for profile in RiskProfile::ALL {
        let shortlist = set.category(profile);
        println!("\n[{profile}] ({} of 3 slots)", shortlist.len());
        for result in shortlist {
            println!(
                "  {:<6} {:>5.1} ({})  {}",
                result.ticker, result.score, result.grade, result.detector,
            );
            for line in &result.pattern.rationale {
                println!("         - {line}");
            }
        }
    }

    Ok(())
}
