//! Frame collector: assembles data frames into the original payload,
//! gating on session id and tolerating redelivery.

use std::collections::BTreeMap;

use crate::framing::HeaderFrame;

pub struct FrameCollector {
    header: HeaderFrame,
    frames: BTreeMap<u8, Vec<u8>>,
}

impl FrameCollector {
    pub fn new(header: HeaderFrame) -> Self {
        FrameCollector {
            header,
            frames: BTreeMap::new(),
        }
    }

    pub fn session_id(&self) -> u16 {
        self.header.session_id
    }

    pub fn header(&self) -> &HeaderFrame {
        &self.header
    }

    /// Add a data frame. Frames from a different session are rejected
    /// silently (`false`); redelivery of an already-held index is a no-op.
    pub fn add(&mut self, session_id: u16, index: u8, data: Vec<u8>) -> bool {
        if session_id != self.header.session_id {
            return false;
        }
        self.frames.entry(index).or_insert(data);
        true
    }

    pub fn is_complete(&self) -> bool {
        (1..=self.header.total_frames).all(|i| self.frames.contains_key(&i))
    }

    pub fn frames_received(&self) -> usize {
        self.frames.len()
    }

    pub fn total_frames(&self) -> usize {
        self.header.total_frames as usize
    }

    /// Concatenate frames in index order, truncated to the header's
    /// declared payload length.
    pub fn reassemble(&self) -> Option<Vec<u8>> {
        if !self.is_complete() {
            return None;
        }
        let mut out = Vec::with_capacity(self.header.payload_len as usize);
        for i in 1..=self.header.total_frames {
            out.extend_from_slice(&self.frames[&i]);
        }
        out.truncate(self.header.payload_len as usize);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(total_frames: u8, payload_len: u16, session_id: u16) -> HeaderFrame {
        HeaderFrame {
            flags: 0,
            total_frames,
            payload_len,
            original_len: payload_len,
            session_id,
        }
    }

    #[test]
    fn completes_and_reassembles_in_order() {
        let mut collector = FrameCollector::new(header(2, 6, 1));
        assert!(collector.add(1, 2, vec![4, 5, 6]));
        assert!(!collector.is_complete());
        assert!(collector.add(1, 1, vec![1, 2, 3]));
        assert!(collector.is_complete());
        assert_eq!(collector.reassemble().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn rejects_wrong_session() {
        let mut collector = FrameCollector::new(header(1, 3, 1));
        assert!(!collector.add(2, 1, vec![9, 9, 9]));
        assert!(!collector.is_complete());
    }

    #[test]
    fn redelivery_is_a_no_op() {
        let mut collector = FrameCollector::new(header(1, 3, 1));
        assert!(collector.add(1, 1, vec![1, 2, 3]));
        assert!(collector.add(1, 1, vec![9, 9, 9]));
        assert_eq!(collector.reassemble().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn truncates_last_frame_overrun() {
        let mut collector = FrameCollector::new(header(1, 2, 1));
        assert!(collector.add(1, 1, vec![1, 2, 3, 4]));
        assert_eq!(collector.reassemble().unwrap(), vec![1, 2]);
    }
}
