//! Line oriented terminal interaction for region selection and confirmation.
use std::cell::RefCell;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use crate::pipeline::{ConfirmationProvider, RegionProvider};
use crate::spectrum::Spectrum;

/// Reads answers from `input` after writing prompts to `output`.
///
/// Unparseable answers are reported and asked again. Running out of input
/// is an [`io::ErrorKind::UnexpectedEof`] error.
#[derive(Debug)]
pub struct TerminalPrompt<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn read_answer(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut buffer = String::new();
        if self.input.read_line(&mut buffer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input ended while waiting for an answer to {:?}", question.trim()),
            ));
        }
        Ok(buffer.trim().to_string())
    }

    fn ask<T>(&mut self, question: &str) -> io::Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        loop {
            let answer = self.read_answer(question)?;
            match answer.parse::<T>() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::debug!("Rejected answer {answer:?}: {e}");
                    writeln!(self.output, "Could not read {answer:?}: {e}")?;
                }
            }
        }
    }
}

impl<R: BufRead, W: Write> RegionProvider for TerminalPrompt<R, W> {
    fn select_region(&mut self, spectrum: &Spectrum) -> io::Result<(i64, i64)> {
        writeln!(
            self.output,
            "Select the region around the feature, pixels 0 to {}",
            spectrum.len()
        )?;
        let left = self.ask("Left edge pixel: ")?;
        let right = self.ask("Right edge pixel: ")?;
        Ok((left, right))
    }
}

impl<R: BufRead, W: Write> ConfirmationProvider for TerminalPrompt<R, W> {
    fn confirm_write(&mut self, destination: &Path) -> io::Result<bool> {
        let answer =
            self.read_answer(&format!("Write corrected spectrum to {}? (y/n): ", destination.display()))?;
        Ok(answer == "y")
    }
}

/// One [`TerminalPrompt`] answering as both region and confirmation provider
/// while sharing the same input stream.
#[derive(Debug)]
pub struct SharedPrompt<R: BufRead, W: Write>(Rc<RefCell<TerminalPrompt<R, W>>>);

impl<R: BufRead, W: Write> Clone for SharedPrompt<R, W> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<R: BufRead, W: Write> SharedPrompt<R, W> {
    pub fn new(prompt: TerminalPrompt<R, W>) -> Self {
        Self(Rc::new(RefCell::new(prompt)))
    }
}

impl<R: BufRead, W: Write> RegionProvider for SharedPrompt<R, W> {
    fn select_region(&mut self, spectrum: &Spectrum) -> io::Result<(i64, i64)> {
        self.0.borrow_mut().select_region(spectrum)
    }
}

impl<R: BufRead, W: Write> ConfirmationProvider for SharedPrompt<R, W> {
    fn confirm_write(&mut self, destination: &Path) -> io::Result<bool> {
        self.0.borrow_mut().confirm_write(destination)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    fn prompt(input: &str) -> TerminalPrompt<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_region_is_reprompted() {
        let spectrum = Spectrum::new(vec![0.0; 50]);
        let mut prompt = prompt("ten\n10\n  40 \n");
        assert_eq!(prompt.select_region(&spectrum).unwrap(), (10, 40));

        let (_, output) = prompt.into_inner();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches("Left edge pixel: ").count(), 2);
        assert_eq!(output.matches("Right edge pixel: ").count(), 1);
        assert!(output.contains("\"ten\""));
    }

    #[test]
    fn test_region_passes_bounds_through() {
        let spectrum = Spectrum::new(vec![0.0; 50]);
        let mut prompt = prompt("30\n-4\n");
        assert_eq!(prompt.select_region(&spectrum).unwrap(), (30, -4));
    }

    #[test]
    fn test_end_of_input_is_an_error() {
        let spectrum = Spectrum::new(vec![0.0; 50]);
        let err = prompt("12\n").select_region(&spectrum).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = prompt("").confirm_write(Path::new("out.fits")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[rstest::rstest]
    #[case("y\n", true)]
    #[case("Y\n", false)]
    #[case("yes\n", false)]
    #[case("n\n", false)]
    #[case("\n", false)]
    #[case(" y \n", true)]
    fn test_only_y_confirms(#[case] input: &str, #[case] expected: bool) {
        let mut prompt = prompt(input);
        assert_eq!(prompt.confirm_write(Path::new("out.fits")).unwrap(), expected);
        let (_, output) = prompt.into_inner();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Write corrected spectrum to out.fits? (y/n): "
        );
    }

    #[test]
    fn test_shared_prompt_reads_one_stream() {
        let spectrum = Spectrum::new(vec![0.0; 50]);
        let mut regions = SharedPrompt::new(prompt("5\n45\ny\n"));
        let mut confirm = regions.clone();
        assert_eq!(regions.select_region(&spectrum).unwrap(), (5, 45));
        assert!(confirm.confirm_write(Path::new("out.fits")).unwrap());
    }
}
