use std::collections::VecDeque;

/// The I/O capability handed to the interpreter. It never knows where output
/// ends up or where input comes from.
pub trait Console {
    /// Emits one line produced by `write`.
    fn write_line(&mut self, line: String);

    /// Blocks until one line of input for `target` is available.
    fn read_line(&mut self, target: &str) -> String;

    /// Reports input that could not be stored in the `read` target.
    fn reject_input(&mut self, message: String);
}

impl<C: Console + ?Sized> Console for &mut C {
    fn write_line(&mut self, line: String) {
        (**self).write_line(line)
    }

    fn read_line(&mut self, target: &str) -> String {
        (**self).read_line(target)
    }

    fn reject_input(&mut self, message: String) {
        (**self).reject_input(message)
    }
}

/// Answers `read` from a fixed list of lines and records everything else.
/// An exhausted script answers with an empty line.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    output: Vec<String>,
    rejections: Vec<String>,
    requests: Vec<String>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn rejections(&self) -> &[String] {
        &self.rejections
    }

    /// Targets of every `read`, in order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }
}

impl Console for ScriptedConsole {
    fn write_line(&mut self, line: String) {
        self.output.push(line);
    }

    fn read_line(&mut self, target: &str) -> String {
        self.requests.push(target.to_string());
        self.inputs.pop_front().unwrap_or_default()
    }

    fn reject_input(&mut self, message: String) {
        self.rejections.push(message);
    }
}
