// Declares a field-less error type that can be used as a warp rejection.
macro_rules! unit_error {
    (
        $(#[$docs:meta])*
        $pub:vis $typ:ident: $display:literal
    ) => (
        $(#[$docs])*
        $pub struct $typ { _p: (), }

        impl $typ {
            pub(crate) fn new() -> Self {
                $typ { _p: () }
            }
        }

        impl ::std::fmt::Debug for $typ {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(stringify!($typ))
            }
        }

        impl ::std::fmt::Display for $typ {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($display)
            }
        }

        impl ::std::error::Error for $typ {}

        impl ::warp::reject::Reject for $typ {}
    )
}
