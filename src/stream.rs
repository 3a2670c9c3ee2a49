use std::sync::mpsc::{channel, Receiver, Sender};

/// Consumer half of a single-pass row sequence.
///
/// Rows may still be arriving while iteration is in progress: `next` blocks
/// until the producer pushes another row or completes the stream, after which
/// the buffered rows drain and iteration ends. A stream is never reused.
/// Dropping a partially drained stream discards the remaining rows.
pub struct RowStream<T> {
    rx: Receiver<T>,
}

impl<T> Iterator for RowStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

/// Producer half. Rows are buffered without bound, so pushing never blocks;
/// an abandoned stream simply leaks its unconsumed rows.
pub(crate) struct RowSink<T> {
    tx: Sender<T>,
}

impl<T> RowSink<T> {
    pub fn push(&self, row: T) {
        // A dropped stream means the consumer walked away; nothing to do.
        let _ = self.tx.send(row);
    }

    /// Completing is dropping the sender; this spells it out at call sites.
    pub fn complete(self) {}
}

pub(crate) fn row_channel<T>() -> (RowSink<T>, RowStream<T>) {
    let (tx, rx) = channel();
    (RowSink { tx }, RowStream { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drains_in_arrival_order_after_completion() {
        let (sink, stream) = row_channel();
        sink.push("a");
        sink.push("b");
        sink.push("c");
        sink.complete();

        assert_eq!(stream.collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn draining_may_start_before_completion() {
        let (sink, stream) = row_channel();

        let consumer = thread::spawn(move || stream.collect::<Vec<_>>());

        sink.push(1);
        sink.push(2);
        sink.push(3);
        sink.complete();

        assert_eq!(consumer.join().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn pushing_into_a_dropped_stream_is_harmless() {
        let (sink, stream) = row_channel();
        drop(stream);
        sink.push(1);
        sink.complete();
    }
}
