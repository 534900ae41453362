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

//! Push records into a sink from a worker thread.
//!
//! The caller fills fixed-size buffers; full buffers travel over a bounded
//! channel to a worker that drains them into the sink. The caller blocks
//! when all buffers are in flight, which bounds the memory of the hand-off.
//! Single producer, single consumer, FIFO.

use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;

use super::Sink;
use crate::{Error, Result};

pub struct AsyncPusher<T, S> {
    buf: Vec<T>,
    buf_size: usize,
    sender: Option<Sender<Vec<T>>>,
    worker: Option<JoinHandle<Result<S>>>,
}

impl<T, S> AsyncPusher<T, S>
where
    T: Send + 'static,
    S: Sink<T> + Send + 'static,
{
    pub fn new(sink: S, buf_size: usize, num_buffers: usize) -> Self {
        let buf_size = buf_size.max(1);
        let (sender, receiver) = bounded::<Vec<T>>(num_buffers.max(1));

        let worker = std::thread::spawn(move || {
            let mut sink = sink;

            for buf in receiver {
                for item in buf {
                    sink.push(item)?;
                }
            }

            Ok(sink)
        });

        Self {
            buf: Vec::with_capacity(buf_size),
            buf_size,
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        self.buf.push(item);

        if self.buf.len() >= self.buf_size {
            self.flush_buffer()?;
        }

        Ok(())
    }

    /// Hand the last partial buffer to the worker, wait for it to drain and
    /// return the sink.
    pub fn finish(mut self) -> Result<S> {
        if !self.buf.is_empty() {
            self.flush_buffer()?;
        }

        drop(self.sender.take());

        self.worker
            .take()
            .expect("finish is called once")
            .join()
            .map_err(|_| Error::invariant("async-pusher", "worker thread panicked"))?
    }

    fn flush_buffer(&mut self) -> Result<()> {
        let buf = std::mem::replace(&mut self.buf, Vec::with_capacity(self.buf_size));

        let sender = self.sender.as_ref().expect("sender lives until finish");

        // a closed channel means the worker bailed out; the real error
        // surfaces when `finish` joins it
        sender
            .send(buf)
            .map_err(|_| Error::invariant("async-pusher", "sink worker is gone"))
    }
}

impl<T, S> Sink<T> for AsyncPusher<T, S>
where
    T: Send + 'static,
    S: Sink<T> + Send + 'static,
{
    fn push(&mut self, item: T) -> Result<()> {
        AsyncPusher::push(self, item)
    }
}

impl<T, S> Drop for AsyncPusher<T, S> {
    fn drop(&mut self) {
        drop(self.sender.take());

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_arrives_in_order() {
        let mut pusher = AsyncPusher::new(Vec::new(), 16, 3);

        for i in 0..1000u64 {
            pusher.push(i).unwrap();
        }

        let sink = pusher.finish().unwrap();
        assert!(sink.iter().copied().eq(0..1000));
    }

    #[test]
    fn empty_finish() {
        let pusher: AsyncPusher<u64, Vec<u64>> = AsyncPusher::new(Vec::new(), 16, 2);
        assert!(pusher.finish().unwrap().is_empty());
    }
}
