//! Conflux - Lock-Free Building Blocks for Low-Latency Pipelines
//!
//! A family of bounded and unbounded FIFO queues parameterised by
//! producer/consumer discipline, an object pool built on top of them, a
//! byte-keyed concurrent trie, a conflation queue that collapses duplicate
//! keys to their latest value, and a typed source/sink pub-sub substrate
//! for wiring the pieces into pipelines.
//!
//! # Queue disciplines
//!
//! | Type | Producers | Consumers | Bounded |
//! |---|---|---|---|
//! | [`spsc::Ring`] | 1 | 1 | yes |
//! | [`mpsc::Ring`] | many | 1 | yes |
//! | [`spmc::Ring`] | 1 | many | yes |
//! | [`mpsc::LinkedList`] | many | 1 | no |
//! | [`spmc::LinkedList`] | 1 | many | no |
//!
//! The discipline is a *contract*: handing the producer side of an SPSC
//! ring to two threads is a misuse exactly like it would be in any other
//! lock-free queue library. Each type documents who may call what.
//!
//! # Example
//!
//! ```
//! use conflux::mpsc;
//!
//! let ring = mpsc::Ring::<u64>::new(4); // 2^4 = 16 slots
//! assert!(ring.push(42).is_ok());
//! assert_eq!(ring.pop(), Some(42));
//! assert_eq!(ring.pop(), None);
//! ```
//!
//! # Conflation
//!
//! ```
//! use conflux::conflation::{Config, ConflationQueue};
//! use conflux::key::Keyed;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Quote { instrument: u64, px: f64 }
//! impl Keyed for Quote {
//!     type Key = u64;
//!     fn key(&self) -> u64 { self.instrument }
//! }
//!
//! let q = ConflationQueue::<Quote>::new(Config::default());
//! q.push(Quote { instrument: 7, px: 100.0 }).unwrap();
//! q.push(Quote { instrument: 7, px: 101.5 }).unwrap(); // conflates
//! assert_eq!(q.len(), 1);
//! assert_eq!(q.pop().unwrap().px, 101.5);
//! ```

mod invariants;

pub mod conflation;
pub mod fifo;
pub mod key;
pub mod mpsc;
pub mod pool;
pub mod pubsub;
pub mod spmc;
pub mod spsc;
pub mod trie;

pub use conflation::{ConflationError, ConflationQueue};
pub use fifo::{Fifo, QueueKind};
pub use key::{Keyed, TrieKey};
pub use pool::Pool;
pub use pubsub::{Adapter, Sink, Source};
pub use trie::Trie;
