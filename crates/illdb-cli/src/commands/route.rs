use std::io::Write;

use illdb_shard::Location;

pub fn print(location: &Location, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(location)?)?;
    Ok(())
}
