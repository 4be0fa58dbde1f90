//! Domain layer: the ingestion queue, the submission loop and the source
//! contract.
//!
//! # Architecture
//!
//! - [`queue`] - Deduplicated accumulation buffer shared by all producers
//! - [`submitter`] - Periodic drain, chunking and delivery
//! - [`source`] - Contract implemented by every ingestion source
//!
//! # Ingestion Flow
//!
//! 1. A [`source::Source`] extracts candidate names from its input
//! 2. [`queue::DomainQueue::add`] validates, lowercases and deduplicates them
//! 3. [`submitter::BatchSubmitter`] drains the queue every tick
//! 4. Each chunk goes to a [`crate::infrastructure::delivery::DeliveryClient`]

pub mod queue;
pub mod source;
pub mod submitter;
