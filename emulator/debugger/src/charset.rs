//! The ZX Spectrum character set, as the ROM renders it.

/// The BASIC keyword tokens occupying character codes 165 through 255.
#[rustfmt::skip]
const KEYWORDS: [&str; 91] = [
    "[RND]", "[INKEY$]", "[PI]", "[FN]", "[POINT]",
    "[SCREEN$]", "[ATTR]", "[AT]", "[TAB]", "[VAL$]", "[CODE]", "[VAL]", "[LEN]", "[SIN]", "[COS]",
    "[TAN]", "[ASN]", "[ACS]", "[ATN]", "[LN]", "[EXP]", "[INT]", "[SQR]", "[SGN]", "[ABS]",
    "[PEEK]", "[IN]", "[USR]", "[STR$]", "[CHR$]", "[NOT]", "[BIN]", "[OR]", "[AND]", "[<=]",
    "[>=]", "[<>]", "[LINE]", "[THEN]", "[TO]", "[STEP]", "[DEF FN]", "[CAT]", "[FORMAT]", "[MOVE]",
    "[ERASE]", "[OPEN #]", "[CLOSE #]", "[MERGE]", "[VERIFY]", "[BEEP]", "[CIRCLE]", "[INK]", "[PAPER]", "[FLASH]",
    "[BRIGHT]", "[INVERSE]", "[OVER]", "[OUT]", "[LPRINT]", "[LLIST]", "[STOP]", "[READ]", "[DATA]", "[RESTORE]",
    "[NEW]", "[BORDER]", "[CONTINUE]", "[DIM]", "[REM]", "[FOR]", "[GO TO]", "[GO SUB]", "[INPUT]", "[LOAD]",
    "[LIST]", "[LET]", "[PAUSE]", "[NEXT]", "[POKE]", "[PRINT]", "[PLOT]", "[RUN]", "[SAVE]", "[RANDOMIZE]",
    "[IF]", "[CLS]", "[DRAW]", "[CLEAR]", "[RETURN]", "[COPY]",
];

/// The 2x2 block graphics at codes 129 through 143.  Code 128 (all quadrants
/// empty) renders as a space; 143 is the full block.
#[rustfmt::skip]
const BLOCK_GRAPHICS: [char; 15] = [
    '\u{259D}', // quadrant upper-right
    '\u{2598}', // quadrant upper-left
    '\u{2580}', // upper half-block
    '\u{2597}', // quadrant lower-right
    '\u{2590}', // right half-block
    '\u{259A}', // quadrants upper-left and lower-right
    '\u{259C}', // all but lower-left
    '\u{2596}', // quadrant lower-left
    '\u{259E}', // quadrants upper-right and lower-left
    '\u{258C}', // left half-block
    '\u{259B}', // all but lower-right
    '\u{2584}', // lower half-block
    '\u{259F}', // all but upper-left
    '\u{2599}', // all but upper-right
    '\u{2588}', // full block
];

pub const REPLACEMENT: char = '\u{FFFD}';

/// Transcode one byte of Spectrum-encoded text onto the end of `out`.
pub fn push_spectrum_char(out: &mut String, byte: u8) {
    match byte {
        12 => out.push('\u{232B}'),
        13 => out.push('\u{23CE}'),
        96 => out.push('\u{00A3}'),
        127 => out.push('\u{00A9}'),
        32..=126 => out.push(byte as char),
        128 => out.push(' '),
        129..=143 => out.push(BLOCK_GRAPHICS[(byte - 129) as usize]),
        165..=255 => out.push_str(KEYWORDS[(byte - 165) as usize]),
        _ => out.push(REPLACEMENT),
    }
}

/// Transcode one byte of ASCII text onto the end of `out`: bytes with the
/// high bit set have no assigned glyph.
pub fn push_ascii_char(out: &mut String, byte: u8) {
    if byte & 0x80 != 0 {
        out.push(REPLACEMENT);
    } else {
        out.push(byte as char);
    }
}
