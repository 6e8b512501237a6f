use clap::builder::styling::{AnsiColor, Effects, Styles};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Terminal styling shortcuts for CLI output.
pub trait AnsiStyles {
    /// Styled like a section header
    fn header(&self) -> String;

    /// Styled like a literal value
    fn literal(&self) -> String;

    /// Styled like a placeholder or secondary text
    fn placeholder(&self) -> String;

    /// Styled like an error
    fn error(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T: AsRef<str>> AnsiStyles for T {
    fn header(&self) -> String {
        console::style(self.as_ref()).yellow().bold().to_string()
    }

    fn literal(&self) -> String {
        console::style(self.as_ref()).blue().bold().to_string()
    }

    fn placeholder(&self) -> String {
        console::style(self.as_ref()).dim().to_string()
    }

    fn error(&self) -> String {
        console::style(self.as_ref()).red().bold().to_string()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Clap help styles.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}
