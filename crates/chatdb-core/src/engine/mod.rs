//! Document query engine.
//!
//! Evaluates the document-store query language over JSON documents held in
//! memory. Supported surface:
//!
//! | Area | Supported |
//! |------|-----------|
//! | Filter fields | equality, dotted paths, array fan-out |
//! | Filter operators | `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex $options $not $size $all $elemMatch` |
//! | Logical | `$and $or $nor` |
//! | Stages | `$match $project $sort $limit $skip $count $unwind $group $addFields $set` |
//! | Accumulators | `$sum $avg $min $max $first $last $push $addToSet` |
//! | Expressions | `"$field"` paths, `$literal`, documents and arrays of these |
//! | Updates | `$set $unset $inc $mul $rename $push` (`$each`) |
//!
//! Anything else is an error, never silently ignored. Values of different
//! types order as null < number < string < document < array < boolean;
//! comparison operators only match values of the same type.

pub mod aggregate;
pub mod filter;
pub mod update;
pub mod value;
