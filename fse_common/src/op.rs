/// Generates the operator boilerplate for transparent newtypes over an integer.
///
/// The trait being implemented must be in scope at the call site.
#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $fn:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self($trait::$fn(self.0, rhs.0))
            }
        }
    };
    (inplace $t:ty, $trait:ident, $fn:ident) => {
        impl $trait for $t {
            fn $fn(&mut self, rhs: Self) {
                $trait::$fn(&mut self.0, rhs.0)
            }
        }
    };
    (unary $t:ty, $trait:ident, $fn:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self($trait::$fn(self.0))
            }
        }
    };
}
