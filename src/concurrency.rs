use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) -> io::Result<Worker> {
        let thread = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || loop {
                let message = match receiver.lock() {
                    Ok(rx) => rx.recv(),
                    Err(poisoned) => poisoned.into_inner().recv(),
                };

                match message {
                    Ok(job) => job(),
                    Err(_) => {
                        debug!(worker = id, "channel closed, worker exiting");
                        break;
                    }
                }
            })?;

        Ok(Worker { id, thread })
    }
}

/// Fixed set of threads pulling jobs off a shared channel.
///
/// Dropping the pool closes the channel and waits for every worker to finish
/// the job it is on.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());

        for worker in self.workers.drain(..) {
            if worker.thread.join().is_err() {
                error!(worker = worker.id, "worker panicked");
            }
        }
    }
}

impl ThreadPool {
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thread pool needs at least one worker",
            ));
        }

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&receiver))?);
        }

        Ok(ThreadPool {
            workers,
            sender: Some(sender),
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f) as Job;
        let sent = self.sender.as_ref().map(|sender| sender.send(job));

        if !matches!(sent, Some(Ok(()))) {
            error!("no worker left to take the job, dropping it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadPool;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn runs_every_job() {
        let done = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::new(4).unwrap();
        assert_eq!(pool.size(), 4);

        for _ in 0..32 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);

        assert_eq!(done.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn jobs_run_on_named_workers() {
        let pool = ThreadPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.execute(move || {
            let name = std::thread::current().name().map(String::from);
            tx.send(name).unwrap();
        });

        assert_eq!(rx.recv().unwrap().as_deref(), Some("worker-0"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = ThreadPool::new(0).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
