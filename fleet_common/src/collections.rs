/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::collections::VecDeque;

/// trait for VecDeques that are used as ringbuffers (i.e. with bounded size and oldest-first eviction).
///
/// We pass in the bound explicitly since `VecDeque::capacity()` is only a lower limit of what the
/// allocator gives us, i.e. it can't be used to enforce an exact max length
pub trait RingDeque<T> {
    /// create a new deque that is supposed to hold up to `max_len` elements
    fn with_max_len (max_len: usize)->Self;

    /// push a new element to the back. If this exceeds `max_len` the oldest (front) element is
    /// removed and returned
    fn push_to_ringbuffer (&mut self, t: T, max_len: usize)->Option<T>;

    /// drop front elements until we have at most `max_len` entries. Returns number of dropped elements
    fn retain_most_recent (&mut self, max_len: usize)->usize;

    fn to_vec (&self)->Vec<T> where T: Clone;
}

impl<T> RingDeque<T> for VecDeque<T> {
    fn with_max_len (max_len: usize)->Self {
        VecDeque::with_capacity( max_len)
    }

    fn push_to_ringbuffer (&mut self, t: T, max_len: usize)->Option<T> {
        if max_len == 0 { return Some(t) }

        let evicted = if self.len() >= max_len { self.pop_front() } else { None };
        self.push_back(t);
        evicted
    }

    fn retain_most_recent (&mut self, max_len: usize)->usize {
        let len = self.len();
        if len > max_len {
            let n_drop = len - max_len;
            self.drain( 0..n_drop);
            n_drop
        } else {
            0
        }
    }

    fn to_vec (&self)->Vec<T> where T: Clone {
        self.iter().cloned().collect()
    }
}
