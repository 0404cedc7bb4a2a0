use anyhow::{bail, Result};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        bail!("usage: linemark <image> [measurements.json]");
    };
    let measurements_path = args.next();

    linemark::run(&image_path, measurements_path.as_deref())?;
    Ok(())
}
