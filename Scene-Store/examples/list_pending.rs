//! Print every scene still waiting for an illustration.
//!
//! ```sh
//! cargo run --example list_pending -- kidsbook.db
//! ```

use scene_store::{RecordStore, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "kidsbook.db".to_string());
    let store = StoreConfig::sqlite(path).open()?;

    let pending = store.pending_scenes().await?;
    if pending.is_empty() {
        println!("Nothing pending.");
        return Ok(());
    }

    for scene in pending {
        println!("{:<40} {}", scene.output_name(), scene.image_prompt);
    }
    Ok(())
}
