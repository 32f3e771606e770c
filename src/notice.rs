//! Console output printed outside of the log: the start-up banner and the
//! configuration-not-found notice.

use std::path::Path;

use chrono::Datelike;
use colored::Colorize;

use crate::config::DEFAULT_CONFIG_PATH;

const LOGO: &str = r"
                     ____
__ Digital Design & Udvikling _____/___/_______ _______ ______
\_____\    \/\/    /   /       /  __   /   ___/
   \___\          /   /   /   /  /_/  /___   /
        \___/\___/___/___/___/___    /______/
                            /_______/";

/// Print the start-up banner.
pub fn print_logo() {
    println!("{} {}", LOGO.blue(), env!("CARGO_PKG_VERSION").bold());
    println!(
        "Copyright © 2022 - {} Jimmi Hansen & Contributors",
        chrono::Local::now().year()
    );
    println!("This software is made available under the terms of the MIT license.");
    println!("The above copyright notice and this permission notice shall be included");
    println!("in all copies or substantial portions of the Software.\n");
}

/// Text explaining how to install a configuration file.
pub fn configuration_notice(path: &Path) -> String {
    format!(
        "{}\n\
         sleepydrive was not able to locate your configuration file, and therefore is not\n\
         able to complete its boot process. Please ensure you have copied your instance\n\
         configuration file into the default location below.\n\
         Looked in: {}\n\
         Default Location: {}\n\
         {}",
        "Error: Configuration File Not Found".white().bold().on_red(),
        path.display(),
        DEFAULT_CONFIG_PATH,
        "This is not a bug with this software. Please do not make a bug report\n\
         for this issue, it will be closed."
            .yellow()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_notice_names_paths() {
        colored::control::set_override(false);
        let notice = configuration_notice(Path::new("/srv/config.toml"));
        assert!(notice.starts_with("Error: Configuration File Not Found"));
        assert!(notice.contains("Looked in: /srv/config.toml"));
        assert!(notice.contains(DEFAULT_CONFIG_PATH));
    }
}
