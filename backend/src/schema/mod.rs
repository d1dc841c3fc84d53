// Mirrors migrations/2024-01-01-000000_create_dao_tables/up.sql.

diesel::table! {
    properties (id) {
        id -> Varchar,
        name -> Text,
        description -> Text,
        image -> Text,
        nft_tokens -> Int8,
        cw20_tokens -> Int8,
        monthly_income -> Int8,
        valuation -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    voting_proposals (id) {
        id -> Varchar,
        title -> Text,
        description -> Text,
        property_id -> Varchar,
        yes_votes -> Int8,
        no_votes -> Int8,
        total_votes -> Int8,
        end_date -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    valuation_reports (id) {
        id -> Varchar,
        property_id -> Varchar,
        valuation -> Int8,
        confidence -> Int8,
        trend -> Text,
        insights -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    user_votes (id) {
        id -> Varchar,
        proposal_id -> Varchar,
        user_id -> Varchar,
        #[max_length = 3]
        vote_type -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(voting_proposals -> properties (property_id));
diesel::joinable!(valuation_reports -> properties (property_id));
diesel::joinable!(user_votes -> voting_proposals (proposal_id));

diesel::allow_tables_to_appear_in_same_query!(
    properties,
    voting_proposals,
    valuation_reports,
    user_votes,
);
