// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! ChaCha20 stream cipher per RFC 8439 Section 2.3-2.4.
//!
//! All working state is zeroized on drop.

use zcore::FastZeroizable;

const BLOCK_LEN: usize = 64;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// ChaCha20 block-generation state.
pub struct ChaCha20 {
    initial: [u32; 16],
    working: [u32; 16],
    keystream: [u8; BLOCK_LEN],
}

impl Default for ChaCha20 {
    fn default() -> Self {
        Self {
            initial: [0; 16],
            working: [0; 16],
            keystream: [0; BLOCK_LEN],
        }
    }
}

impl FastZeroizable for ChaCha20 {
    fn fast_zeroize(&mut self) {
        self.initial.fast_zeroize();
        self.working.fast_zeroize();
        self.keystream.fast_zeroize();
    }
}

impl Drop for ChaCha20 {
    fn drop(&mut self) {
        self.fast_zeroize();
    }
}

impl ChaCha20 {
    #[inline(always)]
    fn quarter_round(&mut self, a: usize, b: usize, c: usize, d: usize) {
        self.working[a] = self.working[a].wrapping_add(self.working[b]);
        self.working[d] ^= self.working[a];
        self.working[d] = self.working[d].rotate_left(16);

        self.working[c] = self.working[c].wrapping_add(self.working[d]);
        self.working[b] ^= self.working[c];
        self.working[b] = self.working[b].rotate_left(12);

        self.working[a] = self.working[a].wrapping_add(self.working[b]);
        self.working[d] ^= self.working[a];
        self.working[d] = self.working[d].rotate_left(8);

        self.working[c] = self.working[c].wrapping_add(self.working[d]);
        self.working[b] ^= self.working[c];
        self.working[b] = self.working[b].rotate_left(7);
    }

    fn init_state(&mut self, key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], counter: u32) {
        self.initial[0] = 0x6170_7865;
        self.initial[1] = 0x3320_646e;
        self.initial[2] = 0x7962_2d32;
        self.initial[3] = 0x6b20_6574;

        for i in 0..8 {
            self.initial[4 + i] = u32::from_le_bytes(
                key[i * 4..i * 4 + 4].try_into().expect("4-byte chunk"),
            );
        }

        self.initial[12] = counter;

        for i in 0..3 {
            self.initial[13 + i] = u32::from_le_bytes(
                nonce[i * 4..i * 4 + 4].try_into().expect("4-byte chunk"),
            );
        }
    }

    fn do_rounds(&mut self) {
        for _ in 0..10 {
            self.quarter_round(0, 4, 8, 12);
            self.quarter_round(1, 5, 9, 13);
            self.quarter_round(2, 6, 10, 14);
            self.quarter_round(3, 7, 11, 15);

            self.quarter_round(0, 5, 10, 15);
            self.quarter_round(1, 6, 11, 12);
            self.quarter_round(2, 7, 8, 13);
            self.quarter_round(3, 4, 9, 14);
        }
    }

    fn generate_block(&mut self, key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], counter: u32) {
        self.init_state(key, nonce, counter);
        self.working.copy_from_slice(&self.initial);
        self.do_rounds();

        for i in 0..16 {
            self.working[i] = self.working[i].wrapping_add(self.initial[i]);
            self.keystream[i * 4..i * 4 + 4].copy_from_slice(&self.working[i].to_le_bytes());
        }

        self.initial.fast_zeroize();
    }

    #[cfg(test)]
    fn block(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        counter: u32,
        output: &mut [u8; BLOCK_LEN],
    ) {
        self.generate_block(key, nonce, counter);
        output.copy_from_slice(&self.keystream);
        self.keystream.fast_zeroize();
    }

    /// XORs `data` in place with the ChaCha20 keystream starting at block
    /// `counter` (spec §4.4). Used by the AEAD layer with `counter = 1`
    /// (counter `0` is reserved for the Poly1305 one-time key).
    pub fn crypt(&mut self, key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], counter: u32, data: &mut [u8]) {
        for (i, chunk) in data.chunks_mut(BLOCK_LEN).enumerate() {
            self.generate_block(key, nonce, counter.wrapping_add(i as u32));
            for (byte, ks_byte) in chunk.iter_mut().zip(self.keystream.iter()) {
                *byte ^= ks_byte;
            }
        }
        self.keystream.fast_zeroize();
    }
}
