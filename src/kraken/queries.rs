//! GraphQL documents sent to the Kraken API

pub const OBTAIN_TOKEN: &str = r#"
mutation ObtainKrakenToken($input: ObtainJSONWebTokenInput!) {
    obtainKrakenToken(input: $input) {
        token
        refreshToken
    }
}
"#;

pub const ACCOUNT_DATA: &str = r#"
query AccountData($accountNumber: String!) {
    account(accountNumber: $accountNumber) {
        id
        number
        ledgers {
            ledgerType
            number
            name
            balance
            paymentRequests(first: 1) {
                edges {
                    node { customerAmount totalAmount paymentStatus expectedPaymentDate }
                }
            }
        }
        properties {
            electricitySupplyPoints {
                id
                distributorStatus
                poweredStatus
                offPeakLabel
                meterKind
                subscribedMaxPower
                isTeleoperable
                providerCalendar { id }
            }
            gasSupplyPoints {
                id
                poweredStatus
                gasNature
                annualConsumption
                isSmartMeter
            }
        }
    }
}
"#;

pub const MEASUREMENTS: &str = r#"
query Measurements(
    $accountId: ID!
    $meterId: String!
    $utilityType: UtilityType!
    $startAt: DateTime!
    $endAt: DateTime!
    $frequency: ReadingFrequencyType!
    $quality: ReadingQualityType!
    $first: Int!
    $after: String
) {
    measurements(
        accountId: $accountId
        meterId: $meterId
        utilityType: $utilityType
        startAt: $startAt
        endAt: $endAt
        readingFrequencyType: $frequency
        readingQuality: $quality
        first: $first
        after: $after
    ) {
        pageInfo { hasNextPage endCursor }
        edges {
            node {
                startAt
                endAt
                value
                metaData {
                    statistics {
                        label
                        value
                        costInclTax { estimatedAmount }
                    }
                }
            }
        }
    }
}
"#;

pub const ELECTRICITY_INDEX: &str = r#"
query ElectricityIndex($accountNumber: String!, $prmId: String!) {
    electricityIndex(accountNumber: $accountNumber, prmId: $prmId) {
        tariffType
        periodStart
        periodEnd
        base { indexStart indexEnd consumption indexReliability }
        hp { indexStart indexEnd consumption indexReliability }
        hc { indexStart indexEnd consumption indexReliability }
    }
}
"#;
