//! Paths command handler: reports where the gateway reads and writes
//! its persisted state.

use anyhow::Result;
use o2o_core::paths::data_dir;

pub fn execute() -> Result<()> {
    let dir = data_dir()?;
    println!("data_dir = {}", dir.display());
    println!("keys = {}", dir.join("keys.json").display());
    println!("channels = {}", dir.join("channels.json").display());
    println!("tokens = {}", dir.join("tokens.json").display());
    println!("access = {}", dir.join("access.json").display());
    Ok(())
}
