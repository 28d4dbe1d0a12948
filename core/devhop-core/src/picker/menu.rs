//! Numbered textual menu: the backend that works with nothing but a TTY.

use super::{Outcome, PickerBackend};
use std::io::{self, BufRead, StdinLock, Stderr, Write};

pub struct NumberedMenu<R, W> {
    input: R,
    output: W,
}

impl NumberedMenu<StdinLock<'static>, Stderr> {
    /// Reads answers from stdin and draws on stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> NumberedMenu<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }

    fn show(&mut self, prompt: &str, items: &[String]) {
        let _ = writeln!(self.output, "{prompt}");
        for (index, item) in items.iter().enumerate() {
            let _ = writeln!(self.output, "  {}) {}", index + 1, item);
        }
    }

    /// Prints `question` and reads one line. `None` on EOF or read error.
    fn ask(&mut self, question: &str) -> Option<String> {
        let _ = write!(self.output, "{question}");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn pick_single(&mut self, items: &[String]) -> Outcome {
        loop {
            let Some(answer) = self.ask(&format!("Enter number [1-{}]: ", items.len())) else {
                return Outcome::Cancelled;
            };
            match parse_index(&answer, items.len()) {
                Some(index) => return Outcome::Selected(vec![items[index].clone()]),
                None => {
                    let _ = writeln!(self.output, "Invalid choice '{answer}'.");
                }
            }
        }
    }

    fn pick_multiple(&mut self, prompt: &str, items: &[String]) -> Outcome {
        loop {
            let Some(answer) =
                self.ask("Enter numbers separated by spaces or commas (blank for none): ")
            else {
                return Outcome::Cancelled;
            };
            let Some(indices) = parse_indices(&answer, items.len()) else {
                let _ = writeln!(self.output, "Invalid choice '{answer}'.");
                continue;
            };
            let picked: Vec<String> = indices.into_iter().map(|i| items[i].clone()).collect();

            let summary = if picked.is_empty() {
                "(none)".to_string()
            } else {
                picked.join(", ")
            };
            let _ = writeln!(self.output, "Selected: {summary}");
            loop {
                let Some(confirm) = self.ask("Confirm? [y/n]: ") else {
                    return Outcome::Cancelled;
                };
                match confirm.to_ascii_lowercase().as_str() {
                    "y" | "yes" => return Outcome::Selected(picked),
                    "n" | "no" => break,
                    _ => {
                        let _ = writeln!(self.output, "Please answer y or n.");
                    }
                }
            }
            self.show(prompt, items);
        }
    }
}

impl<R: BufRead, W: Write> PickerBackend for NumberedMenu<R, W> {
    fn name(&self) -> &'static str {
        "menu"
    }

    fn probe(&self) -> bool {
        true
    }

    fn run(&mut self, prompt: &str, items: &[String], multi: bool) -> Outcome {
        if items.is_empty() {
            return Outcome::Selected(Vec::new());
        }
        self.show(prompt, items);
        if multi {
            self.pick_multiple(prompt, items)
        } else {
            self.pick_single(items)
        }
    }
}

/// 1-based answer to a 0-based index.
fn parse_index(answer: &str, len: usize) -> Option<usize> {
    let number: usize = answer.parse().ok()?;
    (1..=len).contains(&number).then(|| number - 1)
}

fn parse_indices(answer: &str, len: usize) -> Option<Vec<usize>> {
    let mut indices = Vec::new();
    for part in answer.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        let index = parse_index(part, len)?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Some(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn items() -> Vec<String> {
        vec!["home".to_string(), "work".to_string(), "lab".to_string()]
    }

    fn menu(input: &str) -> NumberedMenu<Cursor<Vec<u8>>, Vec<u8>> {
        NumberedMenu::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn transcript(menu: NumberedMenu<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(menu.into_output()).unwrap()
    }

    #[test]
    fn lists_one_based_and_returns_choice() {
        let mut menu = menu("2\n");
        let outcome = menu.run("Host", &items(), false);
        assert_eq!(outcome, Outcome::Selected(vec!["work".to_string()]));
        let text = transcript(menu);
        assert!(text.starts_with("Host\n  1) home\n  2) work\n  3) lab\n"));
    }

    #[test]
    fn reprompts_on_garbage_and_out_of_range() {
        let mut menu = menu("abc\n0\n4\n-1\n\n3\n");
        let outcome = menu.run("Host", &items(), false);
        assert_eq!(outcome, Outcome::Selected(vec!["lab".to_string()]));
        assert_eq!(transcript(menu).matches("Invalid choice").count(), 5);
    }

    #[test]
    fn eof_is_cancel() {
        let mut menu = menu("nope\n");
        assert_eq!(menu.run("Host", &items(), false), Outcome::Cancelled);
    }

    #[test]
    fn multi_echoes_and_requires_confirmation() {
        let mut menu = menu("3, 1 3\nmaybe\ny\n");
        let outcome = menu.run("Integrations", &items(), true);
        assert_eq!(
            outcome,
            Outcome::Selected(vec!["home".to_string(), "lab".to_string()])
        );
        let text = transcript(menu);
        assert!(text.contains("Selected: home, lab"));
        assert!(text.contains("Please answer y or n."));
    }

    #[test]
    fn multi_declined_starts_over() {
        let mut menu = menu("1\nn\n2\nyes\n");
        let outcome = menu.run("Integrations", &items(), true);
        assert_eq!(outcome, Outcome::Selected(vec!["work".to_string()]));
        assert_eq!(transcript(menu).matches("  1) home").count(), 2);
    }

    #[test]
    fn multi_blank_confirms_empty_selection() {
        let mut menu = menu("\ny\n");
        assert_eq!(
            menu.run("Integrations", &items(), true),
            Outcome::Selected(Vec::new())
        );
    }

    #[test]
    fn multi_rejects_out_of_range_entries() {
        let mut menu = menu("1 9\n2\ny\n");
        assert_eq!(
            menu.run("Integrations", &items(), true),
            Outcome::Selected(vec!["work".to_string()])
        );
    }
}
