use super::{Record, Recorder};
use std::{cell::RefCell, rc::Rc};

/// Keeps written records in memory.
///
/// Clones share the same buffer, so a clone handed to a training loop can be
/// inspected afterwards through the original.
#[derive(Debug, Default, Clone)]
pub struct BufferedRecorder {
    buf: Rc<RefCell<Vec<Record>>>,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records held by the recorder, oldest first.
    pub fn records(&self) -> Vec<Record> {
        self.buf.borrow().clone()
    }

    /// The number of records held by the recorder.
    pub fn len(&self) -> usize {
        self.buf.borrow().len()
    }

    /// Returns `true` if the recorder holds no record.
    pub fn is_empty(&self) -> bool {
        self.buf.borrow().is_empty()
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.buf.borrow_mut().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let recorder = BufferedRecorder::new();
        let mut clone = recorder.clone();
        clone.write(Record::from_scalar("x", 1.0));
        clone.write(Record::from_scalar("x", 3.0));

        let records = recorder.records();
        assert_eq!(recorder.len(), 2);
        assert_eq!(records[1].get_scalar("x"), Ok(3.0));
    }
}
