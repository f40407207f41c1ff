use std::io::Write;

/// Write a document's payload, as stored or decompressed, followed by a newline.
pub fn print(payload: &[u8], out: &mut impl Write) -> anyhow::Result<()> {
    out.write_all(payload)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
