//! End-to-end encode/decode scenarios and property tests against real
//! audio, not mocked intermediate state.

use sonicmodem_core::{decode_all, encode, Mode};

#[test]
fn hello_world_wideband_round_trip() {
    let message = b"Hello, world!";
    let audio = encode(message, Mode::Wideband, false, None).unwrap();
    let decoded = decode_all(&audio, false, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn hello_cli_sha256_cross_check() {
    use sha2::{Digest, Sha256};

    let message = b"Hello CLI";
    let audio = encode(message, Mode::Wideband, false, None).unwrap();
    let decoded = decode_all(&audio, false, None).unwrap();
    let expected: [u8; 32] = Sha256::digest(message).into();
    let actual: [u8; 32] = Sha256::digest(&decoded).into();
    assert_eq!(actual, expected);
}

#[test]
fn phone_mode_round_trip() {
    let message = b"phone mode test message";
    let audio = encode(message, Mode::Phone, false, None).unwrap();
    let decoded = decode_all(&audio, false, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn encrypted_round_trip_with_correct_password() {
    let message = b"a secret only the right password can read";
    let audio = encode(message, Mode::Wideband, false, Some("correct horse")).unwrap();
    let decoded = decode_all(&audio, false, Some("correct horse")).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn encrypted_round_trip_with_wrong_password_fails() {
    let message = b"a secret only the right password can read";
    let audio = encode(message, Mode::Wideband, false, Some("correct horse")).unwrap();
    let result = decode_all(&audio, false, Some("wrong password"));
    assert!(result.is_err());
}

#[test]
fn multi_frame_payload_round_trip() {
    let message: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    let audio = encode(&message, Mode::Wideband, false, None).unwrap();
    let decoded = decode_all(&audio, false, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn all_zeros_single_frame_round_trip() {
    let message = vec![0u8; 32];
    let audio = encode(&message, Mode::Wideband, false, None).unwrap();
    let decoded = decode_all(&audio, false, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn punctured_round_trip() {
    let message = b"puncturing trades redundancy for throughput";
    let audio = encode(message, Mode::Wideband, true, None).unwrap();
    let decoded = decode_all(&audio, true, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn survives_three_bit_flips() {
    let message = b"robust to a handful of bit errors";
    let mut audio = encode(message, Mode::Wideband, false, None).unwrap();
    for i in [200usize, 400, 600] {
        if i < audio.len() {
            audio[i] = -audio[i];
        }
    }
    let decoded = decode_all(&audio, false, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn survives_leading_silence() {
    let message = b"leading silence before the signal starts";
    let audio = encode(message, Mode::Wideband, false, None).unwrap();
    let mut padded = vec![0.0f32; 8000];
    padded.extend(audio);
    let decoded = decode_all(&padded, false, None).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn empty_message_round_trip() {
    let message: &[u8] = b"";
    let audio = encode(message, Mode::Wideband, false, None).unwrap();
    let decoded = decode_all(&audio, false, None).unwrap();
    assert_eq!(decoded, message);
}
