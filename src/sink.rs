/*
    Output contracts the engine writes to. Rendering is the caller's business
*/

// Ordered line append, one call per recognition or canonicalization step
pub trait TraceSink {
    fn append_line(&mut self, line: &str);
}

// Bulk replace with a final result
pub trait ResultSink<T> {
    fn publish(&mut self, result: T);
}

// Discards everything
impl TraceSink for () {
    fn append_line(&mut self, _line: &str) {}
}

impl TraceSink for Vec<String> {
    fn append_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl<T, F: FnMut(T)> ResultSink<T> for F {
    fn publish(&mut self, result: T) {
        self(result)
    }
}
