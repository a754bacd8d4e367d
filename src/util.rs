// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use funty::Unsigned;

/// Integer division rounding toward positive infinity
pub fn div_ceil<T: Unsigned>(lhs: T, rhs: T) -> T {
    let d = lhs / rhs;
    if lhs % rhs > T::ZERO {
        d + T::ONE
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::div_ceil;

    #[test]
    fn rounds_up() {
        assert_eq!(div_ceil(32u32, 4), 8);
        assert_eq!(div_ceil(33u32, 4), 9);
        assert_eq!(div_ceil(1usize, 12), 1);
        assert_eq!(div_ceil(0usize, 12), 0);
    }
}
