//! Inputs command implementation.

use valohai_utils::InputOptions;

/// Print the paths of input `name`, or every input name when none is given.
pub fn execute(
    name: Option<String>,
    filter: Option<String>,
    no_archives: bool,
    force_download: bool,
    overrides: Vec<String>,
) -> anyhow::Result<()> {
    let context = super::context(overrides)?;
    let Some(name) = name else {
        for name in context.input_names()? {
            println!("{name}");
        }
        return Ok(());
    };

    let mut options = InputOptions::default().process_archives(!no_archives).force_download(force_download);
    if let Some(pattern) = filter {
        options = options.filter(pattern);
    }
    for path in context.input(name).paths(&options)? {
        println!("{}", path.display());
    }
    Ok(())
}
