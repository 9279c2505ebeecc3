use anyhow::Result;
use sabnzbd_client::client::Sabnzbd;
use sabnzbd_client::entities::{History, HistoryQuery, Queue};
use std::env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let sabnzbd = {
        let url = env::var("SABNZBD_URL")?;
        let api_key = env::var("SABNZBD_API_KEY")?;
        Sabnzbd::builder().url(url).api_key(api_key).build()?
    };

    let version = sabnzbd.version().await?;
    println!("version: {}", version.as_str().unwrap_or("unknown"));

    let queue: Queue = sabnzbd.queue(None, Some(20), None).await?.parse()?;
    for slot in queue.slots {
        println!(
            "job: {}, name: {}, size: {}, progress: {}%",
            slot.nzo_id,
            slot.filename,
            slot.calculate_size(),
            slot.calculate_progress()
        );
    }

    let query = HistoryQuery {
        limit: Some(10),
        ..Default::default()
    };
    let history = sabnzbd.history(&query).await?;
    if let Ok(history) = serde_json::from_value::<History>(history.value()["history"].clone()) {
        for slot in history.slots {
            println!("finished: {}, size: {}", slot.name, slot.calculate_size());
        }
    }

    Ok(())
}
