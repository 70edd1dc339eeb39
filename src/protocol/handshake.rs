//! One-shot connection handshake.
//!
//! The first frame a client sends, whatever it contains, opens the protocol.
//! It is logged and discarded; the server answers with the literal
//! [`HANDSHAKE_ACK`] text frame and from then on treats every frame as a
//! protocol message.

use crate::core::frame::Frame;
use crate::error::Result;
use crate::protocol::outbound::Outbound;
use tracing::info;

/// Protocol version token sent in reply to the client's first frame.
pub const HANDSHAKE_ACK: &str = "OP0200";

/// The acknowledgement frame.
pub fn ack_frame() -> Frame {
    Frame::Text(HANDSHAKE_ACK.to_string())
}

/// Log the client's opening frame and queue the acknowledgement.
pub fn acknowledge(opening: &Frame, outbound: &Outbound) -> Result<()> {
    let connection = outbound.connection_seq();
    info!(connection, frame = %opening.describe(), "Handshake received");
    outbound.send_frame(ack_frame())?;
    info!(connection, ack = HANDSHAKE_ACK, "Handshake acknowledged");
    Ok(())
}
