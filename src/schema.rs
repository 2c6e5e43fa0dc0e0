// Kept in sync by hand with the DDL in repository::context.

diesel::table! {
    platforms (id) {
        id -> Integer,
        name -> Text,
        color -> Text,
        logo_url -> Text,
        enabled -> Bool,
        created_at -> Text,
    }
}

diesel::table! {
    activity_records (id) {
        id -> Integer,
        platform_id -> Integer,
        title -> Text,
        episode_info -> Nullable<Text>,
        watched_at -> Text,
        duration_minutes -> Integer,
        thumbnail_url -> Nullable<Text>,
        genre -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    run_outcomes (id) {
        id -> Integer,
        platform_id -> Integer,
        started_at -> Text,
        status -> Text,
        error_message -> Nullable<Text>,
        items_scraped -> Integer,
    }
}

diesel::joinable!(activity_records -> platforms (platform_id));
diesel::joinable!(run_outcomes -> platforms (platform_id));

diesel::allow_tables_to_appear_in_same_query!(platforms, activity_records, run_outcomes,);
