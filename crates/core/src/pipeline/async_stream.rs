// Rewire generates and randomizes massive graphs in external memory.
// Copyright (C) 2024 Rewire
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>

//! The read-side dual of the async pusher: a worker thread pulls an upstream
//! iterator into fixed-size buffers ahead of the consumer, connected by a
//! bounded channel.

use crossbeam_channel::{bounded, Receiver};
use std::thread::JoinHandle;

pub struct AsyncStream<T> {
    receiver: Option<Receiver<Vec<T>>>,
    current: std::vec::IntoIter<T>,
    worker: Option<JoinHandle<()>>,
}

impl<T> AsyncStream<T>
where
    T: Send + 'static,
{
    pub fn new<I>(iter: I, buf_size: usize, num_buffers: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let buf_size = buf_size.max(1);
        let (sender, receiver) = bounded::<Vec<T>>(num_buffers.max(1));
        let iter = iter.into_iter();

        let worker = std::thread::spawn(move || {
            let mut buf = Vec::with_capacity(buf_size);

            for item in iter {
                buf.push(item);

                if buf.len() >= buf_size {
                    // a closed channel means the consumer is gone
                    if sender.send(buf).is_err() {
                        return;
                    }
                    buf = Vec::with_capacity(buf_size);
                }
            }

            if !buf.is_empty() {
                let _ = sender.send(buf);
            }
        });

        Self {
            receiver: Some(receiver),
            current: Vec::new().into_iter(),
            worker: Some(worker),
        }
    }
}

impl<T> Iterator for AsyncStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.next() {
                return Some(item);
            }

            let receiver = self.receiver.as_ref()?;

            match receiver.recv() {
                Ok(buf) => self.current = buf.into_iter(),
                Err(_) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }
}

impl<T> Drop for AsyncStream<T> {
    fn drop(&mut self) {
        drop(self.receiver.take());

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_everything_in_order() {
        let stream = AsyncStream::new(0..10_000u64, 64, 3);
        assert!(stream.eq(0..10_000));
    }

    #[test]
    fn early_drop_does_not_hang() {
        let mut stream = AsyncStream::new(0..1_000_000u64, 16, 2);
        assert_eq!(stream.next(), Some(0));
        drop(stream);
    }

    #[test]
    fn empty_upstream() {
        let mut stream = AsyncStream::new(std::iter::empty::<u64>(), 16, 2);
        assert_eq!(stream.next(), None);
    }
}
