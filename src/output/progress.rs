//! Progress bar and child output relay.

use crate::pipeline::OutputStream;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;

/// Create a progress bar for the planned scan pairs.
pub fn create_pair_progress(total_pairs: usize, enabled: bool) -> Option<ProgressBar> {
    if !enabled || total_pairs == 0 {
        return None;
    }

    let pb = ProgressBar::new(total_pairs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} scan pairs {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
    );
    Some(pb)
}

/// Show which participant is being processed.
pub fn set_progress_message(pb: Option<&ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_message(message.to_string());
    }
}

/// Finish a progress bar with a message.
pub fn finish_progress(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

/// Increment a progress bar.
pub fn inc_progress(pb: Option<&ProgressBar>) {
    if let Some(pb) = pb {
        pb.inc(1);
    }
}

/// Print one line of child process output verbatim.
///
/// Stdout lines go to stdout unless `stdout_reserved` is set (JSON mode),
/// in which case everything goes to stderr. The progress bar is suspended
/// while printing so lines appear above it.
pub fn relay_line(pb: Option<&ProgressBar>, stream: OutputStream, line: &str, stdout_reserved: bool) {
    let print = || {
        let _ = if stream == OutputStream::Stdout && !stdout_reserved {
            writeln!(std::io::stdout().lock(), "{line}")
        } else {
            writeln!(std::io::stderr().lock(), "{line}")
        };
    };

    match pb {
        Some(pb) => pb.suspend(print),
        None => print(),
    }
}
