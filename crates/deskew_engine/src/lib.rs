//! # Deskew Engine
//!
//! Multi-trial calibration of the time skew between two acquisition
//! channels.
//!
//! Responsibilities:
//! - Calibration state machine (`DeskewSession`)
//! - Trial history
//! - Median aggregation and commit to a calibration sink
//! - Background correlation handoff
//!
//! ## Example
//!
//! ```ignore
//! use deskew_engine::{DeskewSession, PollStatus, SessionSettings};
//!
//! let mut session = DeskewSession::new(
//!     SessionSettings::from_config(&config),
//!     correlator,
//!     store,
//!     trigger,
//! );
//! session.start()?;
//!
//! // host update loop
//! loop {
//!     match session.poll()? {
//!         PollStatus::Done => break,
//!         PollStatus::TrialCompleted(record) => println!("{record:?}"),
//!         PollStatus::NotReady | PollStatus::Busy => {}
//!     }
//! }
//! let summary = session.commit(&mut sink)?;
//! ```

mod aggregate;
mod background;
mod error;
mod history;
mod session;

pub use aggregate::MedianAggregator;
pub use error::SessionError;
pub use history::TrialHistory;
pub use session::{DeskewSession, PollStatus, SessionSettings};

pub use contracts::{CalibrationState, CalibrationSummary, TrialRecord};
