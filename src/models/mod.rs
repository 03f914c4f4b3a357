pub mod movie;
pub mod reservation;
pub mod user;

pub use movie::Movie;
pub use reservation::{BookedSeats, Reservation, ReservationBundle, ReservationView};
pub use user::User;

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Идентификатор пользователя, подтверждённый слоем аутентификации.
    UserId(i32)
);
id_type!(MovieId(i64));
id_type!(ReservationId(i64));
