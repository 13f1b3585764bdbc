//! Convenience macros for working with KNX addresses.

/// Creates a [`GroupAddress`](crate::addressing::GroupAddress) from 3-level notation.
///
/// # Syntax
///
/// ```text
/// ga!(main/middle/sub)
/// ```
///
/// Where `main` is 0-31, `middle` is 0-7, and `sub` is 0-255.
///
/// # Examples
///
/// ```rust
/// use knx_net::{ga, addressing::GroupAddress};
///
/// let addr = ga!(1 / 2 / 3);
/// assert_eq!(addr, GroupAddress::from(0x0A03));
/// ```
///
/// # Compile-Time Validation
///
/// ```compile_fail
/// # use knx_net::ga;
/// let addr = ga!(32 / 0 / 0); // main group must be 0-31
/// ```
#[macro_export]
macro_rules! ga {
    ($main:literal / $middle:literal / $sub:literal) => {{
        const _: () = {
            if $main > 31 {
                panic!("Main group must be 0-31");
            }
            if $middle > 7 {
                panic!("Middle group must be 0-7");
            }
            if $sub > 255 {
                panic!("Sub group must be 0-255");
            }
        };

        // 5 bits main, 3 bits middle, 8 bits sub
        const RAW: u16 = (($main & 0x1F) << 11) | (($middle & 0x07) << 8) | ($sub & 0xFF);
        $crate::addressing::GroupAddress::from(RAW)
    }};
}

#[cfg(test)]
mod tests {
    use crate::addressing::GroupAddress;

    #[test]
    fn test_ga_macro_basic() {
        let addr = ga!(1 / 2 / 3);
        let expected = GroupAddress::from(0x0A03);
        assert_eq!(addr, expected);
    }

    #[test]
    fn test_ga_macro_boundaries() {
        let addr_max = ga!(31 / 7 / 255);
        let addr_min = ga!(0 / 0 / 0);

        let _: GroupAddress = addr_max;
        let _: GroupAddress = addr_min;
    }

    #[test]
    fn test_ga_macro_various_addresses() {
        assert_eq!(ga!(0 / 0 / 1), GroupAddress::from(0x0001));
        assert_eq!(ga!(1 / 0 / 0), GroupAddress::from(0x0800));
        assert_eq!(ga!(5 / 3 / 100), GroupAddress::from(0x2B64));
    }
}
