//! Models command - prints supported model identifiers

use std::io::Write;

use crate::infrastructure::llm::ModelFamily;

pub fn run() -> anyhow::Result<()> {
    write_models(&mut std::io::stdout().lock())
}

fn write_models(out: &mut impl Write) -> anyhow::Result<()> {
    for model in ModelFamily::all_models() {
        writeln!(out, "{}", model)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_model() {
        let mut out = Vec::new();
        write_models(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l == "gpt-4o"));
        assert_eq!(text.lines().count(), ModelFamily::all_models().len());
    }
}
