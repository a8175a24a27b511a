//! Wire formats: the draft document in, the receipt out, and the hex,
//! base64 and amount helpers both sides share.

pub mod draft;
pub mod encoding;
pub mod receipt;

pub use draft::{decode_draft, parse_draft, validate_draft, Draft, DraftDocument, SignMode};
pub use receipt::{ReceiptMode, TxReceipt};
