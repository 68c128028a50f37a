use diesel::prelude::*;

table! {
    departments (id) {
        id -> Uuid,
        name -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    achievement_value_types (id) {
        id -> Uuid,
        name -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    users (id) {
        id -> Uuid,
        name -> Text,
        email -> Text,
        password -> Text,
        role -> Text,
        // JSON array of department ids; legacy rows may hold a single
        // string or null and are normalized at read time.
        department_ids -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    strategic_goals (id) {
        id -> Uuid,
        goal -> Text,
        years -> Array<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    operational_goals (id) {
        id -> Uuid,
        goal -> Text,
        strategic_goal_id -> Nullable<Uuid>,
        strategic_goal_text -> Nullable<Text>,
        department_id -> Nullable<Uuid>,
        indicator -> Nullable<Text>,
        tracking_method -> Text,
        weight -> Float8,
        exclude_from_calculation -> Bool,
        is_reverse -> Bool,
        calculation_method -> Nullable<Text>,
        display_options -> Array<Text>,
        icon -> Nullable<Text>,
        progress -> Jsonb,
        history -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
