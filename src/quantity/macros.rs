/// Unit newtype over `i64` or `f64`.
///
/// Trailing `Mul<…>` and `Div<…>` arguments generate scaling by a bare number.
/// Integer quantities scaled by `f64` are rounded to the nearest unit.
macro_rules! quantity {
    (@define $(#[$meta:meta])* $name:ident, $container:ty, $unit:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(
            ::derive_more::Add,
            ::derive_more::AddAssign,
            ::derive_more::From,
            ::derive_more::FromStr,
            ::derive_more::Neg,
            ::derive_more::Sub,
            ::derive_more::SubAssign,
            ::derive_more::Sum,
            ::serde::Deserialize,
            ::serde::Serialize,
            ::std::clone::Clone,
            ::std::marker::Copy,
            ::std::default::Default,
        )]
        pub struct $name(pub $container);

        impl $name {
            pub const ZERO: Self = Self(0 as $container);
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(formatter, "{} {}", self.0, $unit)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(formatter, "{:?}{}", self.0, $unit)
            }
        }
    };

    (@scale $name:ident(i64), Mul<i64>) => {
        impl ::std::ops::Mul<i64> for $name {
            type Output = Self;

            fn mul(self, rhs: i64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }
    };
    (@scale $name:ident(i64), Div<i64>) => {
        impl ::std::ops::Div<i64> for $name {
            type Output = Self;

            fn div(self, rhs: i64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }
    };
    (@scale $name:ident(i64), Mul<f64>) => {
        impl ::std::ops::Mul<f64> for $name {
            type Output = Self;

            #[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            fn mul(self, rhs: f64) -> Self::Output {
                Self((self.0 as f64 * rhs).round() as i64)
            }
        }
    };
    (@scale $name:ident(f64), Mul<f64>) => {
        impl ::std::ops::Mul<f64> for $name {
            type Output = Self;

            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }
    };
    (@scale $name:ident(f64), Div<f64>) => {
        impl ::std::ops::Div<f64> for $name {
            type Output = Self;

            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }
    };

    ($(#[$meta:meta])* $name:ident(i64), $unit:literal $(, $op:ident<$rhs:ident>)* $(,)?) => {
        quantity!(@define $(#[$meta])* #[derive(PartialEq, Eq, PartialOrd, Ord)] $name, i64, $unit);
        $(quantity!(@scale $name(i64), $op<$rhs>);)*
    };

    // `f64` has no total order on its own, NaN sorts last.
    ($(#[$meta:meta])* $name:ident(f64), $unit:literal $(, $op:ident<$rhs:ident>)* $(,)?) => {
        quantity!(@define $(#[$meta])* $name, f64, $unit);
        $(quantity!(@scale $name(f64), $op<$rhs>);)*

        impl ::std::cmp::Ord for $name {
            fn cmp(&self, other: &Self) -> ::std::cmp::Ordering {
                ::ordered_float::OrderedFloat(self.0).cmp(&::ordered_float::OrderedFloat(other.0))
            }
        }

        impl ::std::cmp::PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<::std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl ::std::cmp::PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.cmp(other).is_eq()
            }
        }

        impl ::std::cmp::Eq for $name {}
    };
}
