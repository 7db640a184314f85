use foundation::time::Time;

/// Metadata for one host render frame.
///
/// The host decides when frames happen (typically from its animation-frame
/// callback) and stamps each with its own clock reading.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Host time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, time: Time) -> Self {
        Self { index, time }
    }

    pub fn first(time: Time) -> Self {
        Self::new(0, time)
    }

    pub fn next(self, time: Time) -> Self {
        Self::new(self.index + 1, time)
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn next_advances_index_and_takes_host_time() {
        let f0 = Frame::first(Time(1.0));
        let f1 = f0.next(Time(1.016));
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(1.016));
    }
}
