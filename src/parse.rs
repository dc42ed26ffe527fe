//! Decoders for raw process-listing output.
//!
//! Each line decoder is a [`FromStr`](std::str::FromStr) impl with its own
//! error type. The batch decoders skip undecodable lines with a warning so a
//! single bad row never costs the rest of the tick.

pub use self::{
    nettop::{NettopLineError, NettopRow, attach_network_output},
    ps::{PsLineError, PsRow, PsTimeError, parse_ps_output, parse_ps_time},
};

mod nettop;
mod ps;
