//! Construct standard HDU types.
//!
//! Only the Primary HDU constructor is carried forward: calibration input reads primary-HDU
//! header cards only, never table or image extensions.

pub use primary_hdu::*;

use super::*;

pub(crate) const DEFAULT_BITPIX_BYTES: [u8; 80] =
    *b"BITPIX  =                    8                                                  ";
pub(crate) const DEFAULT_NAXIS_BYTES: [u8; 80] =
    *b"NAXIS   =                    0                                                  ";
pub(crate) const DEFAULT_END_BYTES: [u8; 80] =
    *b"END                                                                             ";

/// Functions related to a Primary type HDU.
pub mod primary_hdu {
    use super::*;

    /// Constructs an HDU pre-populated with the required cards to be a Primary HDU.
    pub fn default() -> Hdu {
        let simple_card = FitsHeaderCard::from(
            *b"SIMPLE  =                    T                                                  ",
        );
        let bitpix_card = FitsHeaderCard::from(DEFAULT_BITPIX_BYTES);
        let naxis_card = FitsHeaderCard::from(DEFAULT_NAXIS_BYTES);
        let end_card = FitsHeaderCard::from(DEFAULT_END_BYTES);
        let header = FitsHeader {
            cards: vec![simple_card, bitpix_card, naxis_card, end_card],
        };

        Hdu {
            header,
            ..Default::default()
        }
    }
}
