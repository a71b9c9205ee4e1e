/////////////////////////////////////////////////////////////
// rust_blocking_queue::lib.rs - BlockingQueue             //
//                                                         //
// Jim Fawcett, https://JimFawcett.github.io, 19 May 2020  //
/////////////////////////////////////////////////////////////
/*
   This is a BlockingQueue abstraction.  To be shared between
   threads, without using unsafe code, any abstraction must
   be composed only of Mutexes and Condvars or a struct or
   tuple with only those members.
   That means that the blocking queue must hold its native
   queue in a Mutex, as shown below.

   The queue is ordered by a comparator and additionally tracks
   how many popped jobs are still being worked on, so that an
   empty queue only means "done" once no worker can push again.
*/

use binary_heap_plus::BinaryHeap;
use compare::Compare;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

/// Thread-safe priority queue that blocks `get_job` while empty
/// and some other job is still in progress
pub struct BlockingQueue<T, C>
where
    C: Compare<T> + Clone,
{
    queue: Mutex<BinaryHeap<T, C>>,
    flushing: AtomicBool,
    in_progress: AtomicUsize,
    condvar: Condvar,
    compare: C,
}

impl<T, C: Compare<T> + Clone> BlockingQueue<T, C> {
    /// Create empty blocking queue
    pub fn new(compare: C) -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::from_vec_cmp(Vec::new(), compare.clone())),
            flushing: AtomicBool::new(false),
            in_progress: AtomicUsize::new(0),
            condvar: Condvar::new(),
            compare,
        }
    }

    /// push input into the queue, ignored once flushing
    /// - unrecoverable if lock fails so just unwrap
    pub fn add_job(&self, t: T) {
        if self.flushing.load(Ordering::SeqCst) {
            return;
        }
        let mut lq = self.queue.lock().unwrap();
        lq.push(t);
        self.condvar.notify_one();
    }

    /// pop the greatest element
    /// - `None` once the queue is drained and no job is running, or after a flush
    pub fn get_job(&self) -> Option<T> {
        let mut lq = self.queue.lock().unwrap();
        // if the queue is empty we wait, but only if there are running jobs
        while lq.is_empty() && self.in_progress.load(Ordering::SeqCst) > 0 && !self.flushing.load(Ordering::SeqCst) {
            lq = self.condvar.wait(lq).unwrap();
        }

        if self.flushing.load(Ordering::SeqCst) {
            return None;
        }

        let job = lq.pop();
        if job.is_some() {
            self.in_progress.fetch_add(1, Ordering::SeqCst);
        }
        job
    }

    /// must be called once for every job returned by `get_job`
    pub fn job_done(&self) {
        // hold the lock so a waiting worker cannot miss the wakeup
        let _lq = self.queue.lock().unwrap();
        let _ = self
            .in_progress
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.condvar.notify_all();
    }

    /// Wake every worker and refuse further jobs.
    /// Returns whatever was still queued.
    pub fn flush_and_terminate(&self) -> Vec<T> {
        let mut lq = self.queue.lock().unwrap();
        self.flushing.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
        std::mem::replace(&mut *lq, BinaryHeap::from_vec_cmp(Vec::new(), self.compare.clone())).into_vec()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// return number of elements in queue
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
