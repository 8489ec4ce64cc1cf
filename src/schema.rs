// Pickr schema - scheduling and dispatch tables for Diesel ORM

diesel::table! {
    schema_versions (id) {
        id -> Integer,
        version -> Text,
        name -> Text,
        features -> Text,
        introduced_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Text,
        username -> Text,
        tone_sample -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    niches (id) {
        id -> Text,
        title -> Text,
        is_active -> Bool,
    }
}

diesel::table! {
    user_niches (user_id, niche_id) {
        user_id -> Text,
        niche_id -> Text,
    }
}

diesel::table! {
    topics (id) {
        id -> Text,
        niche_id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        source -> Text,
        size -> Integer,
        rank -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    draft_posts (id) {
        id -> Text,
        topic_id -> Text,
        text -> Text,
        category -> Nullable<Text>,
    }
}

diesel::table! {
    tone_edits (id) {
        id -> Integer,
        draft_post_id -> Text,
        user_id -> Text,
        text -> Text,
        created_at -> Text,
    }
}

// ============================================================================
// Calendar Tables
// ============================================================================

diesel::table! {
    week_calendars (id) {
        id -> Integer,
        user_id -> Text,
        iso_year -> Integer,
        week_number -> Integer,
        summary -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    draft_slots (id) {
        id -> Integer,
        calendar_id -> Integer,
        weekday -> Integer,
        hour -> Integer,
        draft_post_id -> Text,
        send_id -> Nullable<Integer>,
    }
}

// ============================================================================
// Dispatch Tables
// ============================================================================

diesel::table! {
    committed_sends (id) {
        id -> Integer,
        user_id -> Text,
        draft_post_id -> Text,
        calendar_id -> Nullable<Integer>,
        scheduled_for -> Nullable<Text>,
        posted_at -> Nullable<Text>,
        platform_post_id -> Nullable<Text>,
        failures -> Integer,
        last_error -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    platform_credentials (id) {
        id -> Integer,
        user_id -> Text,
        access_token -> Text,
        access_token_secret -> Text,
        created_at -> Text,
    }
}

diesel::joinable!(topics -> niches (niche_id));
diesel::joinable!(draft_posts -> topics (topic_id));
diesel::joinable!(draft_slots -> week_calendars (calendar_id));

diesel::allow_tables_to_appear_in_same_query!(
    schema_versions,
    users,
    niches,
    user_niches,
    topics,
    draft_posts,
    tone_edits,
    week_calendars,
    draft_slots,
    committed_sends,
    platform_credentials,
);
