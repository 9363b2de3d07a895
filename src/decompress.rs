//! Decompressor for Thracia 776's compressed graphics and data chunks.
//!
//! A chunk is a sequence of variable-length commands terminated by `0xFF`.
//! The high nybble of each command byte selects the method; the low nybble
//! and any following bytes carry lengths, distances, and data. Two of the
//! methods are back-references: one copies earlier *output* bytes forward,
//! the other rewinds into the *compressed input* and re-executes earlier
//! commands as if they were located at the current position.

use thiserror::Error;

const TERMINATOR: u8 = 0xFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {0:#X}")]
    UnexpectedEof(usize),
    #[error("lookback distance {distance} outside the {len} byte(s) of output at offset {offset:#X}")]
    BadBackDistance {
        offset: usize,
        distance: usize,
        len: usize,
    },
    #[error("compressed lookback at offset {offset:#X} reaches {distance} byte(s) before the stream")]
    BadCompressedLookback { offset: usize, distance: usize },
    #[error("terminator byte used as a sub-command inside a compressed lookback at offset {0:#X}")]
    MalformedSubcommand(usize),
}

/// A readable view of the compressed stream.
///
/// `Raw` is the caller's slice. `Spliced` overlays a back-window in place
/// of a compressed-lookback command: reads inside the window go to the
/// window's source bytes, reads past it continue with the original stream
/// after the command. Layering a `Spliced` over another `Spliced` is what
/// makes nested compressed lookbacks come out right without copying any
/// input.
#[derive(Clone, Copy)]
enum Input<'a> {
    Raw(&'a [u8]),
    Spliced {
        base: &'a Input<'a>,
        /// Position the window is patched in at.
        at: usize,
        /// Start of the window's source bytes in the base view.
        src: usize,
        /// Window size in bytes.
        window: usize,
        /// Size of the command bytes the window replaces.
        skip: usize,
    },
}

impl Input<'_> {
    fn read(&self, pos: usize) -> Result<u8, DecodeError> {
        match *self {
            Input::Raw(data) => data
                .get(pos)
                .copied()
                .ok_or(DecodeError::UnexpectedEof(pos)),
            Input::Spliced {
                base,
                at,
                src,
                window,
                skip,
            } => {
                if pos < at {
                    base.read(pos)
                } else if pos < at + window {
                    base.read(src + (pos - at))
                } else {
                    base.read(pos - window + skip)
                }
            }
        }
    }
}

/// Decompresses the chunk starting at `offset`. Returns the decompressed
/// bytes along with the number of compressed bytes consumed, terminator
/// included.
pub fn decompress(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize), DecodeError> {
    // Typical chunks decode to a few KB at most.
    let mut out = Vec::with_capacity(4096);
    let consumed = decompress_into(data, offset, &mut out)?;
    Ok((out, consumed))
}

/// Like [`decompress`], but appends to an existing buffer. Output
/// back-references may reach into bytes that were already present.
pub fn decompress_into(
    data: &[u8],
    offset: usize,
    out: &mut Vec<u8>,
) -> Result<usize, DecodeError> {
    let input = Input::Raw(data);
    let mut pos = offset;
    while input.read(pos)? != TERMINATOR {
        pos += decode_one(&input, pos, out)?;
    }
    Ok(pos + 1 - offset)
}

/// Decodes the single command at `offset`, appending its output, and
/// returns the number of input bytes the command occupied.
fn decode_one(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    match input.read(offset)? >> 4 {
        0x0..=0x3 => literal(input, offset, out),
        0x4 => orr(input, offset, out),
        0x5 => double(input, offset, out),
        0x6 | 0x7 => append(input, offset, out),
        0x8..=0xD => lookback(input, offset, out),
        0xE => rle(input, offset, out),
        _ => special(input, offset, out),
    }
}

/// Methods 0-3: `NN DD ...` copies `NN + 1` raw bytes to the output.
fn literal(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let length = input.read(offset)? as usize + 1;
    for i in 0..length {
        let b = input.read(offset + 1 + i)?;
        out.push(b);
    }
    Ok(length + 1)
}

/// Method 4: `4L SV DD ...` unpacks `L + 2` nybbles (upper nybble of each
/// data byte first) and combines each with a common value according to the
/// submethod `S`:
///
/// - `0`: repeated upper nybble `V`
/// - `1-7`: repeated lower nybble `V`
/// - `8`: repeated upper zero
/// - `9`: repeated lower zero
/// - `A-D`: repeated upper `F`
/// - `E`: repeated lower `F`
///
/// For submethods 8 and up there is no common value; `V` is an ordinary
/// nybble that leads the list.
fn orr(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let length = (input.read(offset)? & 0x0F) as usize + 2;
    let second = input.read(offset + 1)?;
    let submethod = second >> 4;
    let val = second & 0x0F;

    let mut nybbles = Vec::with_capacity(length + 1);
    if submethod >= 8 {
        nybbles.push(val);
    }
    for i in 0..length {
        let b = input.read(offset + 2 + i / 2)?;
        let shift = 4 * (1 - i % 2);
        nybbles.push((b >> shift) & 0x0F);
    }

    for n in nybbles {
        out.push(match submethod {
            0x0 => (val << 4) | n,
            0x1..=0x7 => (n << 4) | val,
            0x8 => n,
            0x9 => n << 4,
            0xA..=0xD => 0xF0 | n,
            _ => (n << 4) | 0x0F,
        });
    }

    Ok(length.div_ceil(2) + 2)
}

/// Method 5: `5L DD ...` copies each of the next `L + 1` bytes twice.
fn double(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let length = (input.read(offset)? & 0x0F) as usize + 1;
    for i in 0..length {
        let b = input.read(offset + 1 + i)?;
        out.push(b);
        out.push(b);
    }
    Ok(length + 1)
}

/// Methods 6-7: `ML VV DD ...` interleaves a common byte `VV` with `L + 2`
/// data bytes. Method 6 puts the common byte before each data byte,
/// method 7 after.
fn append(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let first = input.read(offset)?;
    let length = (first & 0x0F) as usize + 2;
    let after = first >> 4 == 0x7;
    let val = input.read(offset + 1)?;
    for i in 0..length {
        let b = input.read(offset + 2 + i)?;
        if after {
            out.push(b);
            out.push(val);
        } else {
            out.push(val);
            out.push(b);
        }
    }
    Ok(length + 2)
}

/// Methods 8-D: copy `length` bytes starting `distance` bytes back in the
/// output. Short form (8-B), two bytes: `M0LL LLDD  DDDD DDDD`. Long form
/// (C-D), three bytes: `MM0L LLLL  LDDD DDDD  DDDD DDDD`.
///
/// The copy runs forward one byte at a time so it may read bytes it has
/// itself just produced; a distance shorter than the length repeats a
/// pattern.
fn lookback(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let first = input.read(offset)?;
    let (length, distance, disp) = if first >> 4 < 0xC {
        let length = ((first as usize - 0x80) >> 2) + 2;
        let distance = ((first & 0x03) as usize) << 8 | input.read(offset + 1)? as usize;
        (length, distance, 2)
    } else {
        let second = input.read(offset + 1)?;
        let length = (((first & 0x1F) as usize) << 1 | (second >> 7) as usize) + 2;
        let distance = ((second & 0x7F) as usize) << 8 | input.read(offset + 2)? as usize;
        (length, distance, 3)
    };

    if distance == 0 || distance > out.len() {
        return Err(DecodeError::BadBackDistance {
            offset,
            distance,
            len: out.len(),
        });
    }

    let start = out.len() - distance;
    for i in 0..length {
        let b = out[start + i];
        out.push(b);
    }
    Ok(disp)
}

/// Method E: `EL LL DD` emits the byte `DD` repeated `LLL + 3` times.
fn rle(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let length =
        ((input.read(offset)? & 0x0F) as usize) << 8 | input.read(offset + 1)? as usize;
    let val = input.read(offset + 2)?;
    for _ in 0..length + 3 {
        out.push(val);
    }
    Ok(3)
}

/// Method F: short RLE and the compressed-input lookback.
///
/// Low nybble 0-7 is a two-byte RLE: `MMMM 0LLL  DDDD DDDD`, emitting the
/// byte `D` repeated `L + 3` times.
///
/// Low nybbles 8-E rewind `distance` bytes into the *compressed* stream
/// and re-execute the commands found there, as if those bytes had been
/// written over this command. Long form (8-B), three bytes:
/// `MMMM M0LL  LLLD DDDD  DDDD DDDD`. Short form (C-E), two bytes:
/// `MMMM MM0L  LLDD DDDD`. `L + 3` is the size in bytes of the command
/// window to re-execute.
///
/// `0xFF` never reaches this handler; it terminates the stream.
fn special(input: &Input<'_>, offset: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    let first = input.read(offset)?;
    let submethod = first & 0x0F;

    if submethod < 0x8 {
        let length = (first & 0x07) as usize + 3;
        let val = input.read(offset + 1)?;
        for _ in 0..length {
            out.push(val);
        }
        return Ok(2);
    }

    let second = input.read(offset + 1)?;
    let (span, distance, disp) = if submethod < 0xC {
        let span = (((first & 0x03) as usize) << 3 | (second >> 5) as usize) + 3;
        let distance = ((second & 0x1F) as usize) << 8 | input.read(offset + 2)? as usize;
        (span, distance, 3)
    } else {
        let span = (((first & 0x01) as usize) << 2 | (second >> 6) as usize) + 3;
        let distance = (second & 0x3F) as usize;
        (span, distance, 2)
    };

    if distance > offset {
        return Err(DecodeError::BadCompressedLookback { offset, distance });
    }

    // Patch the back-window in over this command and decode from the
    // current position as if those bytes had always been here. When the
    // span is longer than the window, the re-execution runs on into the
    // bytes that follow this command.
    let window = distance.min(span);
    let spliced = Input::Spliced {
        base: input,
        at: offset,
        src: offset - distance,
        window,
        skip: disp,
    };

    let mut pos = offset;
    while pos < offset + span {
        if spliced.read(pos)? == TERMINATOR {
            return Err(DecodeError::MalformedSubcommand(pos));
        }
        pos += decode_one(&spliced, pos, out)?;
    }

    // When the re-execution read past the back-window it swallowed the
    // bytes after this command too; the caller resumes after everything
    // that was read.
    let read = pos - offset;
    if read > distance {
        Ok(read)
    } else {
        Ok(disp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(stream: &[u8]) -> (Vec<u8>, usize) {
        decompress(stream, 0).expect("stream should decode")
    }

    fn decode_onto(existing: &[u8], stream: &[u8]) -> (Vec<u8>, usize) {
        let mut out = existing.to_vec();
        let consumed =
            decompress_into(stream, 0, &mut out).expect("stream should decode");
        (out, consumed)
    }

    #[test]
    fn literal_copies_bytes_verbatim() {
        let (out, consumed) = decode(&[0x02, 0x3C, 0x04, 0x28, 0xFF]);
        assert_eq!(out, [0x3C, 0x04, 0x28]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn literal_takes_its_length_from_the_whole_first_byte() {
        let mut stream = vec![0x3F];
        stream.extend(0..64u8);
        stream.push(0xFF);
        let (out, consumed) = decode(&stream);
        assert_eq!(out.len(), 64);
        assert_eq!(out[63], 63);
        assert_eq!(consumed, 66);
    }

    #[test]
    fn orr_repeated_upper_nybble() {
        let (out, consumed) = decode(&[0x40, 0x01, 0x23, 0xFF]);
        assert_eq!(out, [0x12, 0x13]);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn orr_repeated_lower_nybble() {
        let (out, consumed) = decode(&[0x41, 0x25, 0x9A, 0xB0, 0xFF]);
        assert_eq!(out, [0x95, 0xA5, 0xB5]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn orr_upper_zero_leads_with_the_value_nybble() {
        let (out, consumed) = decode(&[0x40, 0x8A, 0x12, 0xFF]);
        assert_eq!(out, [0x0A, 0x01, 0x02]);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn orr_lower_zero_shifts_nybbles_high() {
        let (out, consumed) = decode(&[0x41, 0x9B, 0x30, 0x50, 0xFF]);
        assert_eq!(out, [0xB0, 0x30, 0x00, 0x50]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn orr_upper_f_variants_behave_alike() {
        for submethod in [0xA0u8, 0xB0, 0xC0, 0xD0] {
            let (out, _) = decode(&[0x40, submethod | 0x07, 0x12, 0xFF]);
            assert_eq!(out, [0xF7, 0xF1, 0xF2]);
        }
    }

    #[test]
    fn orr_lower_f() {
        let (out, consumed) = decode(&[0x40, 0xEA, 0x1F, 0xFF]);
        assert_eq!(out, [0xAF, 0x1F, 0xFF]);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn double_writes_each_byte_twice() {
        let (out, consumed) = decode(&[0x52, 0x00, 0x0F, 0x70, 0xFF]);
        assert_eq!(out, [0x00, 0x00, 0x0F, 0x0F, 0x70, 0x70]);
        assert_eq!(consumed, 5);
        assert!(out.chunks(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn append_before_each_data_byte() {
        let (out, consumed) = decode(&[0x61, 0x3F, 0x9B, 0x1C, 0xEC, 0xFF]);
        assert_eq!(out, [0x3F, 0x9B, 0x3F, 0x1C, 0x3F, 0xEC]);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn append_after_each_data_byte() {
        let (out, consumed) = decode(&[0x71, 0x3F, 0x9B, 0x1C, 0xEC, 0xFF]);
        assert_eq!(out, [0x9B, 0x3F, 0x1C, 0x3F, 0xEC, 0x3F]);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn short_lookback_copies_from_existing_output() {
        let (out, consumed) = decode_onto(&[0x00, 0x04, 0x00, 0x06], &[0x84, 0x02, 0xFF]);
        assert_eq!(out, [0x00, 0x04, 0x00, 0x06, 0x00, 0x06, 0x00]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn short_lookback_with_distance_one_repeats_the_last_byte() {
        let (out, _) = decode_onto(&[0xAB], &[0x88, 0x01, 0xFF]);
        assert_eq!(out, [0xAB, 0xAB, 0xAB, 0xAB, 0xAB]);
    }

    #[test]
    fn short_lookback_repeats_a_pattern_it_is_still_writing() {
        let (out, _) = decode_onto(&[0x01, 0x02], &[0x88, 0x02, 0xFF]);
        assert_eq!(out, [0x01, 0x02, 0x01, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn long_lookback_reads_a_29_byte_run() {
        let (out, consumed) = decode_onto(&[0x78, 0x00, 0x00, 0x00, 0x00], &[0xCD, 0x80, 0x01, 0xFF]);
        assert_eq!(out.len(), 5 + 29);
        assert!(out[5..].iter().all(|&b| b == 0x00));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn lookback_distance_zero_is_malformed() {
        let err = decompress(&[0x00, 0xAA, 0x84, 0x00, 0xFF], 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadBackDistance {
                offset: 2,
                distance: 0,
                len: 1,
            }
        );
    }

    #[test]
    fn lookback_past_the_start_of_output_is_malformed() {
        let err = decompress(&[0x84, 0x05, 0xFF], 0).unwrap_err();
        assert!(matches!(err, DecodeError::BadBackDistance { distance: 5, .. }));
    }

    #[test]
    fn rle_repeats_a_single_byte() {
        let (out, consumed) = decode(&[0xE0, 0x00, 0x12, 0xFF]);
        assert_eq!(out, [0x12, 0x12, 0x12]);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn rle_twelve_bit_length() {
        let (out, consumed) = decode(&[0xE1, 0x00, 0xAB, 0xFF]);
        assert_eq!(out.len(), 0x100 + 3);
        assert!(out.iter().all(|&b| b == 0xAB));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn short_rle_repeats_a_single_byte() {
        let (out, consumed) = decode(&[0xF1, 0x80, 0xFF]);
        assert_eq!(out, [0x80, 0x80, 0x80, 0x80]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn compressed_lookback_replays_earlier_commands() {
        // Two one-byte literals, then a short compressed lookback whose
        // window covers exactly both of them.
        let (out, consumed) = decode(&[0x00, 0xAA, 0x00, 0xBB, 0xFC, 0x44, 0xFF]);
        assert_eq!(out, [0xAA, 0xBB, 0xAA, 0xBB]);
        assert_eq!(consumed, 7);
    }

    #[test]
    fn compressed_lookback_overrun_consumes_the_following_bytes() {
        // The window holds a single literal; the six-byte span then runs
        // on into the literal and RLE that follow the lookback command,
        // which are decoded once, here, and never re-visited.
        let stream = [
            0x00, 0xAA, // literal AA
            0xFC, 0xC2, // span 6, distance 2
            0x01, 0xBB, 0xCC, // literal BB CC, read by the re-execution
            0xF0, 0xDD, // short RLE DD x3, read by the re-execution
            0xFF,
        ];
        let (out, consumed) = decode(&stream);
        assert_eq!(out, [0xAA, 0xAA, 0xBB, 0xCC, 0xDD, 0xDD, 0xDD]);
        assert_eq!(consumed, 10);
    }

    #[test]
    fn compressed_lookback_overrun_with_a_one_byte_window() {
        // Distance 1 patches a single window byte over the two command
        // bytes, so the window and the bytes it replaces differ in size.
        // The resume point is still the spliced-frame byte count: the
        // re-execution reads 4 bytes, so the outer loop picks up at
        // offset 6, where the closing 0xFF doubles as the terminator.
        let stream = [
            0x00, 0xF0, // literal F0 (the window byte is a short RLE)
            0xFC, 0x41, // span 4, distance 1
            0xBB, // RLE value, read by the re-execution
            0x00, 0xFF, // literal FF, read by the re-execution
        ];
        let (out, consumed) = decode(&stream);
        assert_eq!(out, [0xF0, 0xBB, 0xBB, 0xBB, 0xFF]);
        assert_eq!(consumed, 7);
    }

    #[test]
    fn long_compressed_lookback_replays_an_rle() {
        // E0 00 12 is three bytes; a long compressed lookback with span 3
        // and distance 3 replays it exactly once.
        let (out, consumed) = decode(&[0xE0, 0x00, 0x12, 0xF8, 0x00, 0x03, 0xFF]);
        assert_eq!(out, [0x12, 0x12, 0x12, 0x12, 0x12, 0x12]);
        assert_eq!(consumed, 7);
    }

    #[test]
    fn nested_compressed_lookbacks_resolve_through_both_windows() {
        // The second lookback's window holds both the RLE and the first
        // lookback, so its re-execution replays a replay.
        let stream = [
            0xE0, 0x00, 0x11, // RLE: 11 x3
            0xFC, 0x03, // span 3, distance 3: replays the RLE
            0xFC, 0x85, // span 5, distance 5: replays RLE + lookback
            0xFF,
        ];
        let (out, consumed) = decode(&stream);
        assert_eq!(out, vec![0x11; 12]);
        assert_eq!(consumed, 8);
    }

    #[test]
    fn compressed_lookback_before_the_stream_is_malformed() {
        let err = decompress(&[0x00, 0xAA, 0xFC, 0x49, 0xFF], 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadCompressedLookback {
                offset: 2,
                distance: 9,
            }
        );
    }

    #[test]
    fn terminator_inside_a_lookback_window_is_malformed() {
        // The span outruns the window and lands the re-execution on the
        // stream terminator.
        let err = decompress(&[0x01, 0xFF, 0xFF, 0xFC, 0x43, 0xFF], 0).unwrap_err();
        assert_eq!(err, DecodeError::MalformedSubcommand(6));
    }

    #[test]
    fn truncated_literal_reports_eof() {
        let err = decompress(&[0x03, 0xAA], 0).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEof(2));
    }

    #[test]
    fn missing_terminator_reports_eof() {
        let err = decompress(&[0x00, 0xAA], 0).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEof(2));
    }

    #[test]
    fn empty_input_reports_eof() {
        assert_eq!(decompress(&[], 0).unwrap_err(), DecodeError::UnexpectedEof(0));
    }

    #[test]
    fn terminator_alone_consumes_one_byte() {
        let (out, consumed) = decode(&[0xFF]);
        assert!(out.is_empty());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn decoding_starts_at_the_given_offset() {
        let (out, consumed) = decompress(&[0xAA, 0xBB, 0x00, 0x42, 0xFF], 2).unwrap();
        assert_eq!(out, [0x42]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn consumed_count_always_covers_the_terminator() {
        let streams: [&[u8]; 4] = [
            &[0xFF],
            &[0x00, 0x12, 0xFF],
            &[0xE0, 0x00, 0x34, 0xFF],
            &[0x52, 0x01, 0x02, 0xFF],
        ];
        for stream in streams {
            let (_, consumed) = decompress(stream, 0).unwrap();
            assert_eq!(consumed, stream.len());
            assert_eq!(stream[consumed - 1], 0xFF);
        }
    }
}
