/// Enum columns are stored as their snake_case names.
macro_rules! try_from_string {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = strum::ParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    )*};
}

pub mod attendance;
pub mod leave_quota;
pub mod leave_request;
pub mod role;
pub mod site;
pub mod task;
pub mod user;
