mod handlers;
mod settings;
mod types;

pub use handlers::{
    list_users, list_users_page, user_downloads, user_favourites, user_profile, user_ratings,
    user_replays, user_searches, UserList,
};
pub use settings::{settings_form, update_settings, validate, ValidSettings};
pub use types::{
    ActivityEntry, CurrentUser, NextQuery, PageContext, PlayerEntry, RatingEntry, ReplaySummary,
    SearchEntry, SettingsForm, SettingsFormInput, SettingsPage, UserListPage, UserPage,
    UserProfile, UserSummary, UsersPage,
};

pub(crate) use handlers::context;
