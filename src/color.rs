// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use vector_victor::Vector;

pub type Channel = u8;
pub type Color = [Channel; 4];

/// Four floating point channels, used for texels and endpoints during the encoder search
pub type ColorF = Vector<f32, 4>;

pub trait ColorImpl {
    fn r(&self) -> Channel;
    fn g(&self) -> Channel;
    fn b(&self) -> Channel;
    fn a(&self) -> Channel;

    fn is_gray(&self) -> bool {
        self.r() == self.g() && self.g() == self.b()
    }

    fn to_float(&self) -> ColorF {
        Vector::vec([
            self.r() as f32,
            self.g() as f32,
            self.b() as f32,
            self.a() as f32,
        ])
    }
}

impl ColorImpl for Color {
    fn r(&self) -> Channel {
        self[0]
    }

    fn g(&self) -> Channel {
        self[1]
    }

    fn b(&self) -> Channel {
        self[2]
    }

    fn a(&self) -> Channel {
        self[3]
    }
}

pub trait ColorFImpl {
    fn rgb_sum(&self) -> f32;
    fn clamped(&self, lo: f32, hi: f32) -> ColorF;

    /// Round to the nearest 8-bit color
    fn to_color(&self) -> Color;
}

impl ColorFImpl for ColorF {
    fn rgb_sum(&self) -> f32 {
        self[0] + self[1] + self[2]
    }

    fn clamped(&self, lo: f32, hi: f32) -> ColorF {
        self.elements().map(|&v| v.clamp(lo, hi)).collect()
    }

    fn to_color(&self) -> Color {
        [0, 1, 2, 3].map(|c| self[c].round().clamp(0.0, 255.0) as u8)
    }
}
