//! Terminal UI utilities.

use std::io::Write;

/// Redisplay the prompt after printing an event.
pub fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}
