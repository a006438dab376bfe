use crate::error::Result;
use crate::services::UniverseSource;
use crate::utils::get_data_dir;

pub async fn run() -> Result<()> {
    let tickers = UniverseSource::new(&get_data_dir())?.resolve().await;

    println!("{} tickers in universe", tickers.len());
    for ticker in tickers.iter().take(25) {
        println!("  {ticker}");
    }
    if tickers.len() > 25 {
        println!("  ... and {} more", tickers.len() - 25);
    }

    Ok(())
}
