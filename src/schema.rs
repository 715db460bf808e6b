// Mirrors migrations/2025-10-01-000000_create_raw_mart.

diesel::table! {
    raw.solar_obs (id) {
        id -> Int8,
        obs_date -> Date,
        zip -> Text,
        ghi -> Float8,
        dni -> Float8,
        dhi -> Float8,
        cloud_cover -> Float8,
        temp_c -> Float8,
        source -> Text,
        ingested_at -> Timestamptz,
    }
}

diesel::table! {
    mart.summaries (id) {
        id -> Int8,
        summary_date -> Date,
        zip -> Text,
        summary_text -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    mart.forecast (id) {
        id -> Int8,
        zip -> Text,
        forecast_date -> Date,
        predicted_ghi -> Float8,
        method -> Text,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(forecast, solar_obs, summaries,);
