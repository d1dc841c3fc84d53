//! Fixed demo content loaded when a store starts empty.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Property, VotingProposal};

pub fn sample_properties(now: DateTime<Utc>) -> Vec<Property> {
    vec![
        Property {
            id: "1".to_string(),
            name: "Sunset Villa".to_string(),
            description: "Luxury beachfront villa with stunning ocean views".to_string(),
            image: "https://images.unsplash.com/photo-1613490493576-7fde63acd811?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600".to_string(),
            nft_tokens: 100,
            cw20_tokens: 10_000,
            monthly_income: 2_500,
            valuation: 850_000,
            created_at: now,
        },
        Property {
            id: "2".to_string(),
            name: "Urban Loft".to_string(),
            description: "Modern loft in downtown financial district".to_string(),
            image: "https://images.unsplash.com/photo-1560448204-e02f11c3d0e2?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600".to_string(),
            nft_tokens: 50,
            cw20_tokens: 5_000,
            monthly_income: 1_750,
            valuation: 425_000,
            created_at: now,
        },
    ]
}

pub fn sample_proposals(now: DateTime<Utc>) -> Vec<VotingProposal> {
    let proposal = |id: &str,
                    title: &str,
                    description: &str,
                    property_id: &str,
                    yes: i64,
                    no: i64,
                    days: i64| VotingProposal {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        property_id: property_id.to_string(),
        yes_votes: yes,
        no_votes: no,
        total_votes: yes + no,
        end_date: now + Duration::days(days),
        created_at: now,
    };

    vec![
        proposal(
            "1",
            "Renovate Sunset Villa Kitchen",
            "Proposal to upgrade kitchen appliances and countertops",
            "1",
            42,
            8,
            7,
        ),
        proposal(
            "2",
            "Install Solar Panels on Urban Loft",
            "Reduce energy costs and increase property value",
            "2",
            28,
            15,
            3,
        ),
        proposal(
            "3",
            "Property Manager Change",
            "Switch to a new property management company",
            "1",
            18,
            32,
            5,
        ),
    ]
}
